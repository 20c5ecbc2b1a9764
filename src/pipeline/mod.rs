pub mod diagnostic; // Generation diagnostic trail + optional dump (OQGEN_DUMP_DIR)
pub mod generation; // Model text → validated OQ test suite
