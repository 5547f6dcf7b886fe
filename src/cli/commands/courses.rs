//! Courses command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::create_vector_store;
use anyhow::Result;

/// List indexed courses with their lesson counts.
pub async fn run_courses(settings: Settings) -> Result<()> {
    let vector_store = create_vector_store(&settings)?;
    let titles = vector_store.course_titles().await?;

    if titles.is_empty() {
        Output::info("No courses indexed yet. Use 'pensum index <dir>' to add some.");
        return Ok(());
    }

    Output::header(&format!("Indexed Courses ({})", titles.len()));
    println!();

    for title in &titles {
        match vector_store.get_course(title).await? {
            Some(course) => {
                let mut line = format!("{} ({} lessons)", course.title, course.lessons.len());
                if let Some(instructor) = &course.instructor {
                    line.push_str(&format!(", {}", instructor));
                }
                Output::list_item(&line);
            }
            None => Output::list_item(title),
        }
    }

    println!();
    Output::kv("Total chunks", &vector_store.document_count().await?.to_string());

    Ok(())
}
