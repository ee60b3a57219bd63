/// Canned aggregation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Report {
    AveragePrice,
    TopAuthor,
    Decades,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Whole script
    Run,
    // Single statements
    Find {
        filter_json: String,
        project: Option<String>,
        no_id: bool,
        sort: Option<String>,
        limit: Option<usize>,
        skip: Option<usize>,
    },
    Count {
        filter_json: String,
    },
    UpdateOne {
        filter_json: String,
        update_json: String,
    },
    DeleteOne {
        filter_json: String,
    },
    Aggregate {
        pipeline_json: String,
    },
    Report(Report),
    Page {
        n: usize,
        sort: Option<String>,
    },
    // Indexing
    Indexes,
    Explain {
        filter_json: String,
        with_indexes: bool,
    },
}
