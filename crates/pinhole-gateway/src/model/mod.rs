mod url;

pub use url::{
    BatchUrlRequest, BatchUrlResponse, CreateUrlForm, CreateUrlRequest, CreateUrlResponse,
};
