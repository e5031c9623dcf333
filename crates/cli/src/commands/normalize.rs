//! Show the normalized form used for search matching.

use kron_storefront::search::normalize;

#[allow(clippy::print_stdout)]
pub fn run(text: &str) {
    println!("{}", normalize(text));
}
