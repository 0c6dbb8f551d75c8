//! Structure-aware chunking, content addressing and index lifecycle.
//!
//! Source files are parsed with tree-sitter, cut at declaration boundaries
//! into chunks with deterministic IDs, and written to a
//! [`DocumentStore`](sift_store::DocumentStore). Files without a grammar or
//! without any chunkable node fall back to fixed line windows.

pub mod addressing;
pub mod chunker;
pub mod context;
pub mod embed;
pub mod error;
pub mod languages;
pub mod lifecycle;
pub mod parser;
pub mod report;
pub mod symbols;
pub mod syntax;
pub mod window;

pub use addressing::{chunk_id, content_hash, document_id};
pub use chunker::{Chunk, ChunkableKinds, StructuralChunker};
pub use embed::{Embedder, HashingEmbedder};
pub use error::{EmbedError, IndexError, Result};
pub use languages::{Lang, detect_language, is_indexable};
pub use lifecycle::{IndexManager, IndexOptions, SourceFile};
pub use parser::{FallbackParser, SourceParser, TreeSitterParser, default_parser};
pub use report::{DeleteReport, FileOutcome, FileStatus, IndexReport, SyncReport};
pub use syntax::SyntaxNode;
pub use window::{WindowConfig, line_windows};
