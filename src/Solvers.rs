/// Fixed-point and Wegstein iteration of tear streams for flowsheets with recycle loops.
pub mod recycle;
