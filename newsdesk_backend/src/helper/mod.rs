pub mod access_helpers;
pub mod account_helpers;
pub mod article_helpers;
pub mod category_helpers;
pub mod feed_helpers;
pub mod media_helpers;
pub mod sanitization_helpers;
pub mod store_helpers;
pub mod ticket_helpers;
pub mod workflow_helpers;

#[cfg(test)]
pub mod test_support;
