use crate::mealplans::repo_types::{distinct_tags, MealPlan};
use crate::profiles::repo_types::Profile;

pub const SYSTEM_PROMPT: &str =
    "You provide structured JSON responses and never include additional commentary.";

fn join<T: ToString>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

pub fn profile_summary(profile: Option<&Profile>) -> String {
    let Some(profile) = profile else {
        return "- No active profile found.".into();
    };

    let mut segments = Vec::new();
    if !profile.name.trim().is_empty() {
        segments.push(format!("Name: {}", profile.name));
    }
    if let Some(age) = profile.age {
        segments.push(format!("Age: {age}"));
    }
    if let Some(gender) = profile.gender.as_deref().filter(|g| !g.is_empty()) {
        segments.push(format!("Gender: {gender}"));
    }
    if let Some(goal) = profile.goal {
        segments.push(format!("Goal: {goal}"));
    }
    if let Some(target) = profile.calorie_target.filter(|t| *t > 0) {
        segments.push(format!("Calorie target: {target}"));
    }
    let prefs = distinct_tags(&profile.dietary_preferences);
    if !prefs.is_empty() {
        segments.push(format!("Dietary preferences: {}", join(&prefs)));
    }
    let allergies: Vec<&str> = profile
        .allergies
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    if !allergies.is_empty() {
        segments.push(format!("Allergies: {}", allergies.join(", ")));
    }

    if segments.is_empty() {
        return "- Minimal profile information available.".into();
    }
    format!("- {}.", segments.join("; "))
}

pub fn describe_plan(plan: &MealPlan, index: usize) -> String {
    let macros = format!(
        "Calories: {}, Protein: {}g, Fat: {}g, Carbs: {}g",
        plan.calories, plan.protein, plan.fat, plan.carbs
    );
    let tags = if plan.diet_tags.is_empty() {
        "none".to_string()
    } else {
        join(&plan.diet_tags)
    };
    let title = if plan.title.trim().is_empty() { "Untitled" } else { plan.title.as_str() };
    let description = if plan.description.trim().is_empty() {
        "No description."
    } else {
        plan.description.as_str()
    };

    [
        format!("{}. ID: {}", index + 1, plan.id),
        format!("Title: {title}"),
        format!("Goal type: {}", plan.goal_type),
        format!("Diet tags: {tags}"),
        format!("Macros: {macros}"),
        format!("Description: {description}"),
    ]
    .join("\n")
}

pub fn build_prompt(profile: Option<&Profile>, candidates: &[MealPlan]) -> String {
    let plans = candidates
        .iter()
        .enumerate()
        .map(|(i, p)| describe_plan(p, i))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are an expert nutrition coach. Rank the following meal plans for the user profile provided. \
         Respond with strict JSON matching this schema:\n\n\
         {{\n  \"rankings\": [\n    {{ \"id\": \"<mealPlanId>\", \"rationale\": \"<why this plan suits the user>\" }}\n  ]\n}}\n\n\
         Only include IDs from the candidate list. Provide succinct rationales (1-2 sentences).\n\n\
         User profile:\n{}\n\nMeal plans:\n{}",
        profile_summary(profile),
        plans
    )
}
