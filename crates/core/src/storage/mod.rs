#[cfg(not(target_arch = "wasm32"))]
pub mod file_store;
pub mod session_store;
pub mod store;
