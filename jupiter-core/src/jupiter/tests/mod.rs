/*
    Tests for the jupiter subsystem

    Test suite covering:
    - Reference scenarios (concurrent inserts, split deletes, pruned history)
    - Convergence under random edits and delivery orders
    - Vector time edge cases
    - Split composition edge cases
*/

pub mod convergence_tests;
