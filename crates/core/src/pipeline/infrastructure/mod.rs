pub mod threaded_export_worker;
