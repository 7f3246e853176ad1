pub mod directory_image_library;
pub mod image_file_reader;
pub mod image_file_writer;
