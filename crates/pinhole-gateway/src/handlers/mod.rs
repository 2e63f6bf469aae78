mod ping;
mod url;

pub use ping::ping_handler;
pub use url::{
    create_url_handler, create_url_json_handler, create_urls_batch_handler, redirect_handler,
};
