pub mod app;
pub mod config;
pub mod error;
pub mod state;

pub mod models {
    pub mod media;
    pub mod session;
}

pub mod media {
    pub mod library;
    pub mod range;
    pub mod streamer;
}

pub mod auth {
    pub mod store;
    pub mod validator;
}

pub mod handlers {
    pub mod music;
}

pub mod middleware_layer {
    pub mod auth;
}
