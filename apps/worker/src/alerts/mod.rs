/// State-change notifications
pub mod dispatcher;
pub mod messenger;

pub use dispatcher::AlertDispatcher;
pub use messenger::{LogMessenger, Messenger, TwilioCredentials, TwilioMessenger};
