pub mod mock_db;
pub mod postgres_purchase_repository;
pub mod postgres_user_repository;
pub mod purchase_repository;
pub mod user_repository;
