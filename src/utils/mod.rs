pub mod analytics;
pub mod device;
pub mod geo;
pub mod hash_ip;
pub mod jwt;
pub mod qr_format;
pub mod qr_render;
