mod collaretto;
mod mattress;
mod order;
mod sizes;
mod table;

pub use collaretto::*;
pub use mattress::*;
pub use order::*;
pub use sizes::*;
pub use table::*;
