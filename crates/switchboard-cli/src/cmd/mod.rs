pub mod check;
pub mod devices;
pub mod run;
pub mod test_switch;
