// chemistry module
pub mod chemistry {
    pub mod abundance;
    pub mod composition;
}

// algorithm module
pub mod algorithm {
    pub mod isotope;
    pub mod correction;
    pub mod labeling;
}

// data module
pub mod data {
    pub mod record;
    pub mod labeling;
}

pub mod batch;
pub mod error;
