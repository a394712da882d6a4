pub mod results;
pub mod summary;

#[cfg(test)]
pub mod test_fixtures;
