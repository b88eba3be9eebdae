/// Entry point handed to action sources (navigation, commands, speed tests).
///
/// Implementations must return without waiting for the write to become
/// durable: callers include UI event handlers that cannot block.
pub trait Recorder: Send + Sync {
    fn record(&self, category: &str, detail: &str);
}
