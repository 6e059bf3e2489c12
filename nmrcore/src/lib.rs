// data module
pub mod data {
    pub mod spectrum;
    pub mod features;
}

// filter module
pub mod filter {
    pub mod catalog;
    pub mod chain;
    pub mod digital;
    pub mod apodization;
    pub mod fourier;
    pub mod phase;
    pub mod baseline;
    pub mod zero_fill;
    pub mod exclusion;
    pub mod shift;
}

// algorithm module
pub mod algorithm {
    pub mod noise;
    pub mod peaks;
    pub mod multiplet;
    pub mod ranges;
    pub mod zones;
}

// quantification module
pub mod quantify;

// contour module
pub mod contour {
    pub mod levels;
    pub mod trace;
}

pub mod error;
