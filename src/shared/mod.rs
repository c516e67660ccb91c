pub mod constants;
pub mod download;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod test_helpers;
