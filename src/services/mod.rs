pub mod drive;
pub mod storage;
pub mod upload_service;
