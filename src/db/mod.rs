pub mod mongodb;
pub mod qr_store;
