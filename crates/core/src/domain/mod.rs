pub mod article;
pub mod history;
