pub mod request;
pub mod response;

pub use request::{
    Command, ConnectArguments, DisconnectArguments, MethodCall, SendByteArguments,
    SendTextArguments,
};
pub use response::MethodResponse;
