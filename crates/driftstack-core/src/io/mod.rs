pub mod shift_table;
pub mod stack_io;

pub use shift_table::{read_shift_table, save_shift_tables, write_shift_table};
pub use stack_io::{read_frame_dir, read_stack, read_tiff_stack, stack_info, write_tiff_stack};
