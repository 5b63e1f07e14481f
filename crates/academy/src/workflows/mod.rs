pub mod certification;
