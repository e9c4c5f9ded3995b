pub mod scb;
