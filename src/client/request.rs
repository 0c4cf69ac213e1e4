use super::Client;
use crate::error::Result;
use crate::message::Message;
use crate::transport::Transport;

/// An incoming message together with the client that received it, giving
/// handlers a way to reply back through the concentrator.
pub struct Request<T: Transport> {
    pub msg: Message,
    client: Client<T>,
}

impl<T: Transport> Request<T> {
    pub(crate) fn new(msg: Message, client: Client<T>) -> Self {
        Self { msg, client }
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    /// Send a response back to the originator.
    ///
    /// ```text
    /// req.reply("OK", "LAMP", &[])        -> SENDER:OK:LAMP:US
    /// req.reply("OK", "TIMER", &["qwe"])  -> SENDER:OK:TIMER:qwe:US
    /// ```
    pub async fn reply(&self, verb: &str, noun: &str, args: &[&str]) -> Result<()> {
        self.client.send(&self.msg.from, verb, noun, args).await
    }
}
