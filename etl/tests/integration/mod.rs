mod ingest_test;
mod merge_test;
mod pipeline_test;
mod sqlite_source_test;
mod transform_test;
