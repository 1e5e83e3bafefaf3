//src/errors.rs

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error reading or writing \"{file}\": {source}")]
    FileIo {
        file: String,
        source: std::io::Error,
    },

    #[error("Required column \"{column}\" not found in {file}")]
    MissingColumn { column: String, file: String },

    #[error("Columns of {file} do not match the first report.\nexpected: {expected}\nfound:    {found}")]
    SchemaMismatch {
        file: String,
        expected: String,
        found: String,
    },

    #[error("Could not parse \"{value}\" in column \"{column}\" on line {line} of {file} as a number")]
    ParseValue {
        file: String,
        line: usize,
        column: String,
        value: String,
    },

    #[error("Error encoding or decoding YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Error drawing plot: {0}")]
    Plot(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),
}

impl Error {
    pub fn file_io(file: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::FileIo {
            file: file.as_ref().display().to_string(),
            source,
        }
    }
}
