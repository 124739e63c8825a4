pub mod result_dto;
pub mod session_dto;
