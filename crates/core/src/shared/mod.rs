pub mod constants;
pub mod edit_state;
pub mod error;
pub mod rotation;
pub mod sample;
pub mod track;
