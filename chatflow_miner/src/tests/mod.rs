//! Cross-module tests: end-to-end scenarios and algebraic properties over generated tables

mod scenarios;
