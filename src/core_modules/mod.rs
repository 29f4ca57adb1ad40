pub mod frame_decoder;
pub mod mapping;
pub mod pixel;
pub mod rate_counter;
pub mod receiver;
pub mod strip_buffer;
