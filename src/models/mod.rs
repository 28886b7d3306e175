pub mod qr_record;
pub mod role;
pub mod user;
