mod not_found;
mod ws;

pub use not_found::not_found;
pub use ws::handle_ws;
