#![allow(dead_code)]

pub const BACH: &str = "Bach";
pub const CHOPIN: &str = "Chopin";
pub const GOULD: &str = "Gould";
pub const ARGERICH: &str = "Argerich";
pub const BAROQUE: &str = "Baroque";
pub const ROMANTIC: &str = "Romantic";

/// Track ids in the seeded catalog, in insertion order.
pub const PRELUDE_ID: i64 = 1;
pub const FUGUE_ID: i64 = 2;
pub const NOCTURNE_ID: i64 = 3;
pub const BALLADE_ID: i64 = 4;
