pub mod challenge;
pub mod word_guess;
