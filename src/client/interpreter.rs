use serde_json::Value;

/// Consumer of decoded server messages
pub trait Interpreter: Send + Sync {
    fn notify(&self, message: Value);
}

impl<F> Interpreter for F
where
    F: Fn(Value) + Send + Sync,
{
    fn notify(&self, message: Value) {
        self(message)
    }
}
