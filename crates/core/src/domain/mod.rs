pub mod crm;
pub mod lead;
pub mod sync;
