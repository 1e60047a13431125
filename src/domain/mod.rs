// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that define what the system
// works with: questions, answer spans and vocabularies.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A question with its context passage and gold answer span
pub mod example;

// Token → id mapping with the reserved -NULL-/-UNK-/-ENT- ids
pub mod vocab;

// Dataset split abstraction implemented by the data layer
pub mod traits;
