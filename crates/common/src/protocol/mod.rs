mod request;
mod response;

pub use request::WebSocketRequest;
pub use response::HttpResponse;
