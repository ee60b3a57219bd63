use super::model::Book;

/// The ten sample books, in insertion order.
#[must_use]
pub fn sample_books() -> Vec<Book> {
    vec![
        Book::new("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 1925, 12.99, true, 218, "Scribner"),
        Book::new("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 10.99, true, 281, "J.B. Lippincott & Co."),
        Book::new("1984", "George Orwell", "Dystopian", 1949, 9.99, false, 328, "Secker & Warburg"),
        Book::new("A Brief History of Time", "Stephen Hawking", "Science", 1988, 15.99, true, 212, "Bantam Books"),
        Book::new("The Silent Patient", "Alex Michaelides", "Thriller", 2019, 14.49, true, 336, "Celadon Books"),
        Book::new("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 11.50, true, 310, "George Allen & Unwin"),
        Book::new("Becoming", "Michelle Obama", "Biography", 2018, 16.99, true, 448, "Crown Publishing"),
        Book::new("The Martian", "Andy Weir", "Science Fiction", 2011, 13.25, false, 369, "Crown Publishing"),
        Book::new("Educated", "Tara Westover", "Memoir", 2018, 15.25, true, 352, "Random House"),
        Book::new("The Midnight Library", "Matt Haig", "Fantasy", 2020, 17.99, true, 304, "Canongate Books"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn titles_and_authors_are_distinct() {
        let books = sample_books();
        assert_eq!(books.len(), 10);
        assert_eq!(books.iter().map(|b| &b.title).collect::<HashSet<_>>().len(), 10);
        assert_eq!(books.iter().map(|b| &b.author).collect::<HashSet<_>>().len(), 10);
    }
}
