//! Built-in household vocabulary.
//!
//! Canonical activity names never contain a seed key as a whole word, so
//! resolving already-canonical text is a no-op.

/// (alias key, canonical activity) pairs shipped with the assistant.
pub const SEED_ALIASES: &[(&str, &str)] = &[
    ("dishes", "washing-up"),
    ("the dishes", "washing-up"),
    ("washing up", "washing-up"),
    ("the washing up", "washing-up"),
    ("dishwasher", "washing-up"),
    ("washing", "laundry"),
    ("the washing", "laundry"),
    ("clothes wash", "laundry"),
    ("hoovering", "vacuuming"),
    ("hoovered", "vacuuming"),
    ("hoover", "vacuuming"),
    ("vacuumed", "vacuuming"),
    ("bins", "bin-duty"),
    ("rubbish", "bin-duty"),
    ("recycling", "bin-duty"),
    ("trash", "bin-duty"),
    ("dinner", "cooking"),
    ("cooked", "cooking"),
    ("tea", "cooking"),
    ("food shop", "grocery-shopping"),
    ("big shop", "grocery-shopping"),
    ("groceries", "grocery-shopping"),
    ("supermarket", "grocery-shopping"),
    ("bathroom", "bathroom-cleaning"),
    ("loo", "bathroom-cleaning"),
    ("toilet", "bathroom-cleaning"),
    ("ironed", "ironing"),
    ("school run", "school-run"),
    ("drop off", "school-run"),
    ("pick up", "school-run"),
    ("walked the dog", "dog-walking"),
    ("dog walk", "dog-walking"),
    ("mowed", "gardening"),
    ("lawn", "gardening"),
    ("weeding", "gardening"),
];
