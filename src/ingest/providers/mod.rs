pub mod currents;
