pub mod classification;
pub mod record;
pub mod report;
pub mod validation;
