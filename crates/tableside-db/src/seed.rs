//! Demo dataset shared by the in-memory store and the `seed` binary.

/// One table of the demo floor plan.
#[derive(Debug, Clone, Copy)]
pub struct SeedTable {
    pub number: i64,
    pub name: &'static str,
    pub capacity: i64,
    pub location: &'static str,
}

/// Seeded for every store scope.
pub const DEMO_TABLES: [SeedTable; 2] = [
    SeedTable {
        number: 1,
        name: "Table 1",
        capacity: 4,
        location: "Indoor",
    },
    SeedTable {
        number: 2,
        name: "Table 2",
        capacity: 2,
        location: "Outdoor",
    },
];

/// Operator recorded on the seeded cash register.
pub const DEMO_REGISTER_OPERATOR: &str = "Demo";
