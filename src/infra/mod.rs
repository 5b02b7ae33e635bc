pub mod csv_loader;
pub mod issue_report_adapter;
