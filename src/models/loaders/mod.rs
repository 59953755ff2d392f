pub mod file_loader;

pub use file_loader::{load_all_invoice_files, load_invoice_file};
